pub mod class;
pub mod course;
pub mod student;
pub mod time_slot;

pub use class::{Class, ClassFilter, ClassKey, ClassPatch, ClassStatus, NewClass, PaymentStatus};
pub use course::{Course, NewCourseRequest};
pub use student::{NewStudentRequest, Student, StudentPatch};
pub use time_slot::{ScheduleError, SlotError, SlotWindow, TimeSlot};
