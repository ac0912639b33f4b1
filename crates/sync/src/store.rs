use crate::binding::BindingDescriptor;

/// Per-document registry of binding descriptors.
///
/// The sync engine never defines the on-disk format; it only needs
/// descriptors to round-trip verbatim. `remove` of an unknown id is not an
/// error: disposal paths call it unconditionally.
pub trait BindingStore {
    fn add(&mut self, descriptor: &BindingDescriptor) -> Result<(), String>;
    fn remove(&mut self, binding_id: &str) -> Result<(), String>;
    fn find_all(&self, document_id: &str) -> Result<Vec<BindingDescriptor>, String>;
}

/// In-memory registry, used by tests and as the reference implementation.
#[derive(Debug, Default)]
pub struct MemoryBindingStore {
    entries: Vec<BindingDescriptor>,
}

impl MemoryBindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, binding_id: &str) -> bool {
        self.entries.iter().any(|d| d.binding_id == binding_id)
    }
}

impl BindingStore for MemoryBindingStore {
    fn add(&mut self, descriptor: &BindingDescriptor) -> Result<(), String> {
        self.entries.retain(|d| d.binding_id != descriptor.binding_id);
        self.entries.push(descriptor.clone());
        Ok(())
    }

    fn remove(&mut self, binding_id: &str) -> Result<(), String> {
        self.entries.retain(|d| d.binding_id != binding_id);
        Ok(())
    }

    fn find_all(&self, document_id: &str) -> Result<Vec<BindingDescriptor>, String> {
        Ok(self.entries.iter().filter(|d| d.document_id == document_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(document_id: &str, object: &str) -> BindingDescriptor {
        BindingDescriptor::new(document_id, "Book1", "Sheet1", object, "c", "dbo", "t", "q", 0)
    }

    #[test]
    fn add_replaces_same_binding_id() {
        let mut store = MemoryBindingStore::new();
        store.add(&descriptor("d1", "Orders")).unwrap();
        let mut updated = descriptor("d1", "Orders");
        updated.query = "select 1".into();
        store.add(&updated).unwrap();
        let all = store.find_all("d1").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].query, "select 1");
    }

    #[test]
    fn find_all_filters_by_document() {
        let mut store = MemoryBindingStore::new();
        store.add(&descriptor("d1", "A")).unwrap();
        store.add(&descriptor("d2", "B")).unwrap();
        assert_eq!(store.find_all("d1").unwrap().len(), 1);
        assert_eq!(store.find_all("d3").unwrap().len(), 0);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut store = MemoryBindingStore::new();
        store.add(&descriptor("d1", "A")).unwrap();
        store.remove("d1/A").unwrap();
        store.remove("d1/A").unwrap();
        assert!(store.is_empty());
    }
}
