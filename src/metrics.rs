use crate::fields::FieldId;

#[derive(Debug, Clone)]
pub struct FieldMetrics {
    pub field: FieldId,
    pub lines: usize,
    pub truncated: bool,
}

/// Observability snapshot for one render call. Never feeds back into the
/// output bytes.
#[derive(Debug, Clone, Default)]
pub struct RenderMetrics {
    pub fields: Vec<FieldMetrics>,
    pub signature_placed: bool,
    pub render_ms: f64,
    pub output_bytes: usize,
}

impl RenderMetrics {
    pub fn truncated_fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.fields
            .iter()
            .filter(|f| f.truncated)
            .map(|f| f.field)
    }
}
