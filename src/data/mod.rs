use record::Listing;

pub mod application;
pub mod coaching;
pub mod non_teacher;
pub mod parent;
pub mod record;
pub mod review;
pub mod school;
pub mod store;
pub mod student;
pub mod teacher;
pub mod tuition;
pub mod user;
pub mod vacancy;
pub mod validate;

/// Every collection holding [`record::Record`]s.
pub const LISTING_COLLECTIONS: [&str; 8] = [
    teacher::Teacher::COLLECTION,
    non_teacher::NonTeacher::COLLECTION,
    coaching::Coaching::COLLECTION,
    school::School::COLLECTION,
    student::Student::COLLECTION,
    parent::Parent::COLLECTION,
    tuition::TuitionPost::COLLECTION,
    vacancy::Vacancy::COLLECTION,
];

/// Listing collections an owner has at most one record in.
pub const PROFILE_COLLECTIONS: [&str; 6] = [
    teacher::Teacher::COLLECTION,
    non_teacher::NonTeacher::COLLECTION,
    coaching::Coaching::COLLECTION,
    school::School::COLLECTION,
    student::Student::COLLECTION,
    parent::Parent::COLLECTION,
];
