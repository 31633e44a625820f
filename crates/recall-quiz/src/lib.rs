//! Recall Quiz: session selection, answer grading, flashcard generation.

pub mod generation;
pub mod grading;
pub mod selector;
pub mod session;

pub use generation::FlashcardGenerator;
pub use grading::{
    FollowUp, Grade, GradeSource, GradingAdjudicator, HintType, ParsedVerdict, Rubric, Verdict,
};
pub use selector::{AnswerOutcome, QuizSelector, Strategy};
pub use session::{AnswerRecord, QuizSession, SessionManager, SessionProgress, SessionView};
