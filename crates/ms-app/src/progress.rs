use ms_core::UnitKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudyStage {
    PurgingCache,
    CheckingCache,
    LoadedFromCache,
    RunningSolver,
    SavingResults,
    UnitSkipped,
    UnitFailed,
    Completed,
}

impl StudyStage {
    pub fn label(&self) -> &'static str {
        match self {
            StudyStage::PurgingCache => "purging cache",
            StudyStage::CheckingCache => "checking cache",
            StudyStage::LoadedFromCache => "cached",
            StudyStage::RunningSolver => "solving",
            StudyStage::SavingResults => "saving",
            StudyStage::UnitSkipped => "skipped",
            StudyStage::UnitFailed => "failed",
            StudyStage::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StudyProgressEvent {
    pub stage: StudyStage,
    pub unit: Option<UnitKey>,
    /// 0-based position of `unit` in the enumeration.
    pub index: usize,
    pub total: usize,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
}
