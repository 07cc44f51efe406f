use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    Class, ClassFilter, ClassPatch, Course, NewClass, NewCourseRequest, NewStudentRequest, Student,
    StudentPatch,
};

/// Persistent table of courses, students and classes.
///
/// Writes are atomic per row only; callers must not assume a transaction
/// spans several calls.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn ping(&self) -> Result<(), AppError>;

    async fn get_course_by_id(&self, id: i64) -> Result<Option<Course>, AppError>;
    async fn list_courses(&self) -> Result<Vec<Course>, AppError>;
    async fn create_course(&self, req: NewCourseRequest) -> Result<Course, AppError>;

    async fn get_student_by_id(&self, id: i64) -> Result<Option<Student>, AppError>;
    async fn create_student(&self, req: NewStudentRequest) -> Result<Student, AppError>;
    /// Returns false when no student has this id.
    async fn update_student(&self, id: i64, patch: StudentPatch) -> Result<bool, AppError>;

    async fn create_class(&self, payload: &NewClass) -> Result<i64, AppError>;
    async fn get_class_by_id(&self, id: i64) -> Result<Option<Class>, AppError>;
    /// Ordered by date, then start time.
    async fn list_classes(&self, filter: &ClassFilter) -> Result<Vec<Class>, AppError>;
    async fn update_class(&self, id: i64, patch: ClassPatch) -> Result<Option<Class>, AppError>;
    /// Returns false when no class has this id.
    async fn delete_class(&self, id: i64) -> Result<bool, AppError>;
}

#[derive(Default)]
struct Tables {
    last_id: i64,
    courses: Vec<Course>,
    students: Vec<Student>,
    classes: Vec<Class>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// In-process store for tests and local demos.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables.lock().map_err(|_| AppError::InternalServerError)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }

    async fn get_course_by_id(&self, id: i64) -> Result<Option<Course>, AppError> {
        Ok(self.lock()?.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        let mut courses = self.lock()?.courses.clone();
        courses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(courses)
    }

    async fn create_course(&self, req: NewCourseRequest) -> Result<Course, AppError> {
        let mut tables = self.lock()?;
        let course = Course {
            id: tables.next_id(),
            name: req.name,
            price: req.price,
            shared_class_price: req.shared_class_price,
            duration_default: req.duration_default,
            color: req.color,
            is_active: req.is_active,
        };
        tables.courses.push(course.clone());
        Ok(course)
    }

    async fn get_student_by_id(&self, id: i64) -> Result<Option<Student>, AppError> {
        Ok(self.lock()?.students.iter().find(|s| s.id == id).cloned())
    }

    async fn create_student(&self, req: NewStudentRequest) -> Result<Student, AppError> {
        let mut tables = self.lock()?;
        let student = Student {
            id: tables.next_id(),
            first_name: req.first_name,
            last_name: req.last_name,
            course_id: req.course_id,
            start_date: req.start_date,
            fixed_schedule: req.fixed_schedule,
            has_shared_pricing: req.has_shared_pricing,
            email: req.email,
            phone: req.phone,
            tax_id: req.tax_id,
        };
        tables.students.push(student.clone());
        Ok(student)
    }

    async fn update_student(&self, id: i64, patch: StudentPatch) -> Result<bool, AppError> {
        let mut tables = self.lock()?;
        match tables.students.iter_mut().find(|s| s.id == id) {
            Some(student) => {
                patch.apply(student);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_class(&self, payload: &NewClass) -> Result<i64, AppError> {
        let mut tables = self.lock()?;
        let id = tables.next_id();
        tables.classes.push(payload.clone().into_class(id));
        Ok(id)
    }

    async fn get_class_by_id(&self, id: i64) -> Result<Option<Class>, AppError> {
        Ok(self.lock()?.classes.iter().find(|c| c.id == id).cloned())
    }

    async fn list_classes(&self, filter: &ClassFilter) -> Result<Vec<Class>, AppError> {
        let mut classes: Vec<Class> = self
            .lock()?
            .classes
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        classes.sort_by_key(|c| (c.date, c.start_time, c.id));
        Ok(classes)
    }

    async fn update_class(&self, id: i64, patch: ClassPatch) -> Result<Option<Class>, AppError> {
        let mut tables = self.lock()?;
        Ok(tables.classes.iter_mut().find(|c| c.id == id).map(|class| {
            patch.apply(class);
            class.clone()
        }))
    }

    async fn delete_class(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.lock()?;
        let before = tables.classes.len();
        tables.classes.retain(|c| c.id != id);
        Ok(tables.classes.len() < before)
    }
}
