use crate::shared::region::Region;

/// The latest set of detected face regions plus the tick that issued it.
///
/// `seq` is the issuing tick's sequence number; publication drops any
/// result whose sequence is not newer than the one already published, so
/// a slow early call can never overwrite a fast later one. Only the most
/// recent value is kept; there is no history.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    seq: u64,
    regions: Vec<Region>,
}

impl DetectionResult {
    pub fn new(seq: u64, regions: Vec<Region>) -> Self {
        Self { seq, regions }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Derived presence flag: true iff at least one region was detected.
    pub fn has_face(&self) -> bool {
        !self.regions.is_empty()
    }
}
