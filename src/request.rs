use crate::xlog::Row;

/// A caller-supplied description of a redo record, consumed by
/// [`crate::txn::add_redo`].
///
/// Implementors describe one mutation: the record's type code, and either a pre-built
/// [`Row`] (when the caller already has the exact on-disk payload) or an `encode` that
/// writes it piecemeal into segments the coordinator assembles itself.
pub trait Request: Send + Sync {
    /// The record type tag stored in the redo row.
    fn op_type(&self) -> u16;

    /// If set, used verbatim as the redo row and `encode` is never called.
    fn header(&self) -> Option<Row> {
        None
    }

    /// Appends this request's body as one or more segments into `body_buf`, returning the
    /// number of segments appended.
    fn encode(&self, body_buf: &mut Vec<bytes::Bytes>) -> usize;
}
