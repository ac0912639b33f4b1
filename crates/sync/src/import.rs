//! Import pipeline: fetch a result set, optionally transform it through a
//! staging area, place it under bounded geometry, bind a table object over
//! it, and register the binding.

use gridlink_core::{CellValue, Rect, SheetId};

use crate::binding::BindingDescriptor;
use crate::collide;
use crate::error::SyncError;
use crate::host::GridHost;
use crate::source::{Connection, TableData};
use crate::staging::{StagingArea, StagingOptions, StagingVariant};
use crate::store::BindingStore;

/// How the fetched rows land on the sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportShape {
    /// Bind straight to a freshly created table; no staging.
    Direct,
    /// Prepend a synthetic sequential key column, via staging.
    WithRowKey,
    /// Column-remapped subset, via staging. `None` = blank output column.
    Mapped(Vec<Option<usize>>),
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub connection_id: String,
    pub schema_name: String,
    pub table_name: String,
    pub query: String,
    pub result_set: usize,
    /// Destination sheet name and top-left anchor.
    pub sheet: String,
    pub anchor: (usize, usize),
    pub object_name: String,
    pub shape: ImportShape,
    pub options: StagingOptions,
}

/// Run one import end to end. On success the new table is bound,
/// disconnected again (cells stay user-editable), and its descriptor is
/// registered and returned.
pub fn run_import<H: GridHost>(
    host: &mut H,
    conn: &dyn Connection,
    store: &mut dyn BindingStore,
    request: &ImportRequest,
) -> Result<BindingDescriptor, SyncError> {
    conn.probe()?;
    let data = conn.execute(&request.query, request.result_set)?;
    let sheet = host
        .sheet_id(&request.sheet)
        .ok_or_else(|| SyncError::SheetMissing(request.sheet.clone()))?;
    if host.table(&request.object_name).is_some() {
        return Err(SyncError::ObjectExists(request.object_name.clone()));
    }

    let dest = match &request.shape {
        ImportShape::Direct => place_direct(host, sheet, request, &data)?,
        ImportShape::WithRowKey => place_staged(
            host,
            sheet,
            request,
            &data,
            StagingVariant::CopyWithKey { first_row_is_header: true },
        )?,
        ImportShape::Mapped(mapping) => {
            place_staged(host, sheet, request, &data, StagingVariant::ColumnMapped(mapping.clone()))?
        }
    };

    if !host.create_table(sheet, &request.object_name, dest, true) {
        return Err(SyncError::ObjectExists(request.object_name.clone()));
    }
    host.set_table_connected(&request.object_name, true);
    let labels = import_labels(request, &data, dest.cols);
    for (index, label) in labels.iter().enumerate().rev() {
        host.rename_table_column(&request.object_name, index, label);
    }
    host.set_table_connected(&request.object_name, false);

    let document_id = host.document_id();
    let document_name = host.document_name();
    let mut descriptor = BindingDescriptor::new(
        &document_id,
        &document_name,
        &request.sheet,
        &request.object_name,
        &request.connection_id,
        &request.schema_name,
        &request.table_name,
        &request.query,
        request.result_set,
    );
    descriptor.with_row_key = matches!(request.shape, ImportShape::WithRowKey);
    descriptor.column_names = labels;
    store.add(&descriptor).map_err(SyncError::Store)?;
    Ok(descriptor)
}

/// Clamp the destination at the anchor and clear the first colliding
/// neighbor out of the way, then clamp again.
fn clamp_destination<H: GridHost>(
    host: &mut H,
    sheet: SheetId,
    request: &ImportRequest,
    rows: usize,
    cols: usize,
) -> Result<Rect, SyncError> {
    let (top, left) = request.anchor;
    let mut dest = Rect::clamped(sheet, top, left, rows, cols, host.limits());
    if dest.is_empty() {
        return Err(SyncError::NoRoom { sheet: request.sheet.clone() });
    }
    if let Some(hit) = collide::find_first_intersection(&dest, &host.occupants(sheet), None) {
        collide::resolve(&dest, &hit).apply(host, sheet);
        dest = Rect::clamped(sheet, top, left, rows, cols, host.limits());
    }
    Ok(dest)
}

fn place_direct<H: GridHost>(
    host: &mut H,
    sheet: SheetId,
    request: &ImportRequest,
    data: &TableData,
) -> Result<Rect, SyncError> {
    let dest = clamp_destination(host, sheet, request, data.rows.len() + 1, data.columns.len())?;
    let body_rows = dest.rows.saturating_sub(1);
    for i in 0..body_rows.min(data.rows.len()) {
        for j in 0..dest.cols {
            let value = data.rows[i].get(j).cloned().unwrap_or(CellValue::Empty);
            host.set_value(sheet, dest.top + 1 + i, dest.left + j, value);
        }
    }
    Ok(dest)
}

/// Land the fetched rows (header included) in a hidden scratch area, build
/// the requested transform over it, and copy the transformed rect to the
/// destination. All scratch space is released before returning.
fn place_staged<H: GridHost>(
    host: &mut H,
    sheet: SheetId,
    request: &ImportRequest,
    data: &TableData,
    variant: StagingVariant,
) -> Result<Rect, SyncError> {
    let landing = host.add_scratch_sheet(true).ok_or(SyncError::StagingFailed)?;
    for (c, name) in data.columns.iter().enumerate() {
        host.set_value(landing, 0, c, CellValue::Text(name.clone()));
    }
    for (r, row) in data.rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            host.set_value(landing, r + 1, c, value.clone());
        }
    }
    let source =
        Rect::clamped(landing, 0, 0, data.rows.len() + 1, data.columns.len(), host.limits());

    let mut staging = StagingArea::new(host, source, variant, request.options.clone());
    let result = (|| -> Result<Rect, SyncError> {
        let out = staging.build().ok_or(SyncError::StagingFailed)?;
        let dest = clamp_destination(staging.host_mut(), sheet, request, out.rows, out.cols)?;
        // Values only; the key column is re-established as formulas below.
        for r in 0..dest.rows {
            for c in 0..dest.cols {
                let value = staging.host().value(out.sheet, r, c);
                staging.host_mut().set_value(sheet, dest.top + r, dest.left + c, value);
            }
        }
        Ok(dest)
    })();
    drop(staging);
    host.raise_sheet_visibility(landing);
    host.remove_sheet(landing);

    let dest = result?;
    if matches!(request.shape, ImportShape::WithRowKey) {
        for r in 1..dest.rows {
            host.set_row_formula(sheet, dest.top + r, dest.left, -(dest.top as i64 + 1));
        }
    }
    Ok(dest)
}

/// One label per output column: synthetic key first when present, then
/// source display names with positional fallbacks.
fn import_labels(request: &ImportRequest, data: &TableData, total_cols: usize) -> Vec<String> {
    let mut labels = Vec::with_capacity(total_cols);
    for index in 0..total_cols {
        let source_name = match &request.shape {
            ImportShape::Direct => data.columns.get(index).cloned(),
            ImportShape::WithRowKey => {
                if index == 0 {
                    labels.push("Row".to_string());
                    continue;
                }
                data.columns.get(index - 1).cloned()
            }
            ImportShape::Mapped(mapping) => mapping
                .get(index)
                .copied()
                .flatten()
                .and_then(|src| data.columns.get(src).cloned()),
        };
        let name = source_name.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        labels.push(name.unwrap_or_else(|| format!("Column{}", index + 1)));
    }
    labels
}
