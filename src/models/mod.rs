//! Typed models for portal records.

mod de;

pub mod course;
pub mod exam;
pub mod gpa;
pub mod profile;
pub mod schedule;
pub mod score;
pub mod selection;

pub use course::LibCourse;
pub use exam::{Exam, ExamSlot};
pub use gpa::{ConditionLogic, CourseRange, Gpa, GpaQueryParams, Ranking};
pub use profile::{Gender, Profile};
pub use schedule::ScheduleCourse;
pub use score::{Score, ScoreFactor};
pub use selection::{
    ClassDetail, LessonSlot, SectorParams, SelectionCourse, SelectionSharedInfo, Teacher,
};
