pub mod config;
pub mod db;
pub mod error;
pub mod parser;
pub mod results;
pub mod runtime;
pub mod service;
pub mod store;

pub use config::Config;
pub use db::schema::{
    Answer, NewSurvey, Question, QuestionKind, Response, Survey, SurveyPatch, SurveySettings,
    SurveyStatus,
};
pub use db::surveys::CloseOutcome;
pub use error::{CoreError, CoreResult};
pub use results::{build_csv_export, build_results_data, QuestionStats, SurveyResults, ViewerContext};
pub use service::SurveyService;
pub use store::{KvStore, MemoryStore, Namespace, StoreError};
