mod result;

pub use result::StageResult;
