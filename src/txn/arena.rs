/// A per-task scratch region for staging a redo row's body segments while
/// [`super::add_redo`] runs.
///
/// Reset (not freed) at every terminal transition so a task that runs many short
/// transactions back-to-back reuses one allocation instead of churning the allocator.
#[derive(Default)]
pub struct Scratch {
    segments: Vec<bytes::Bytes>,
}

impl Scratch {
    pub fn reset(&mut self) {
        self.segments.clear();
    }

    pub fn segments_mut(&mut self) -> &mut Vec<bytes::Bytes> {
        &mut self.segments
    }

    pub fn take(&mut self) -> Vec<bytes::Bytes> {
        std::mem::take(&mut self.segments)
    }
}
