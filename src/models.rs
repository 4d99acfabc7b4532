use chrono::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User role enumeration for role-based access control.
///
/// Stored in the database as the PostgreSQL ENUM type "user_role".
/// Role transitions to Instructor happen only via an approved instructor
/// application, never self-assigned at registration.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Instructor,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Student => "student",
            UserRole::Instructor => "instructor",
            UserRole::Admin => "admin",
        }
    }
}

/// Account verification state. Accounts start Pending and become Active
/// after OTP verification.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
}

impl UserStatus {
    pub fn to_str(&self) -> &str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

/// Course lifecycle. Courses advance only via explicit instructor/admin
/// actions; there are no automatic transitions.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "course_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Draft,
    PendingReview,
    Approved,
    Published,
    Rejected,
}

impl CourseStatus {
    /// Only a draft may be submitted for review.
    pub fn can_submit(&self) -> bool {
        *self == CourseStatus::Draft
    }

    /// Review decisions apply only to courses waiting for review.
    pub fn can_review(&self) -> bool {
        *self == CourseStatus::PendingReview
    }

    /// Only an approved course may be published.
    pub fn can_publish(&self) -> bool {
        *self == CourseStatus::Approved
    }

    /// Students may enroll in published courses only.
    pub fn is_enrollable(&self) -> bool {
        *self == CourseStatus::Published
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "lesson_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    Video,
    Article,
    Quiz,
    Assignment,
    Resource,
}

/// Lesson publication state, independent of the parent course's status.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "lesson_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LessonStatus {
    Draft,
    Published,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "enrollment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Cancelled,
}

/// Payment lifecycle: Pending -> Completed | Failed | Refunded.
/// Terminal states never transition further.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// Completion is derived from progress, never stored independently of it.
pub fn derive_completed(progress: i32) -> bool {
    progress >= 100
}

/// New sort_order for an appended sibling: max(existing) + 1, or 0 for the
/// first child. Keeps sequences dense and zero-based.
pub fn next_sort_order(max_existing: Option<i32>) -> i32 {
    match max_existing {
        Some(max) => max + 1,
        None => 0,
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    // Null for federated-identity-only accounts.
    pub password: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A course is managed by its owning instructor or by an admin.
    pub fn can_manage_course(&self, course: &Course) -> bool {
        self.role == UserRole::Admin || course.instructor_id == self.id
    }

    /// Enrollment and payment listings for a course are visible to its
    /// owner and to admins.
    pub fn can_view_course_enrollments(&self, course: &Course) -> bool {
        self.can_manage_course(course)
    }

    /// Course creation requires the instructor role; the role itself is only
    /// granted through an approved application.
    pub fn can_create_course(&self) -> bool {
        self.role == UserRole::Instructor || self.role == UserRole::Admin
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Otp {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Otp {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Resend requests inside the cooldown window are rejected with 429.
    pub fn in_resend_cooldown(&self, now: DateTime<Utc>, cooldown_seconds: i64) -> bool {
        now - self.created_at < chrono::Duration::seconds(cooldown_seconds)
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct InstructorApplication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub motivation: String,
    pub status: ApplicationStatus,
    pub review_reason: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Course {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub category: Option<String>,
    pub level: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: CourseStatus,
    pub rejection_reason: Option<String>,
    pub capacity: Option<i32>,
    pub enrollment_count: i32,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Capacity-bounded courses stop accepting enrollments once full.
    pub fn has_capacity(&self) -> bool {
        match self.capacity {
            Some(capacity) => self.enrollment_count < capacity,
            None => true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct CourseModule {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Lesson {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub content: String,
    pub lesson_type: LessonType,
    pub status: LessonStatus,
    pub sort_order: i32,
    pub duration_minutes: Option<i32>,
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub status: EnrollmentStatus,
    pub progress: i32,
    pub completed: bool,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub provider: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct ActivityLog {
    pub id: Uuid,
    pub event_type: String,
    pub actor_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub enrollment_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course_with(status: CourseStatus, instructor_id: Uuid) -> Course {
        Course {
            id: Uuid::new_v4(),
            instructor_id,
            title: "Rust for Backend Engineers".to_string(),
            description: "From zero to production".to_string(),
            price: Decimal::new(4999, 2),
            category: None,
            level: None,
            thumbnail_url: None,
            status,
            rejection_reason: None,
            capacity: None,
            enrollment_count: 0,
            published_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user_with(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password: Some("hash".to_string()),
            role,
            status: UserStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn submit_allowed_only_from_draft() {
        assert!(CourseStatus::Draft.can_submit());
        for status in [
            CourseStatus::PendingReview,
            CourseStatus::Approved,
            CourseStatus::Published,
            CourseStatus::Rejected,
        ] {
            assert!(!status.can_submit());
        }
    }

    #[test]
    fn publish_allowed_only_from_approved() {
        assert!(CourseStatus::Approved.can_publish());
        for status in [
            CourseStatus::Draft,
            CourseStatus::PendingReview,
            CourseStatus::Published,
            CourseStatus::Rejected,
        ] {
            assert!(!status.can_publish());
        }
    }

    #[test]
    fn enrollment_requires_published_status() {
        assert!(CourseStatus::Published.is_enrollable());
        for status in [
            CourseStatus::Draft,
            CourseStatus::PendingReview,
            CourseStatus::Approved,
            CourseStatus::Rejected,
        ] {
            assert!(!status.is_enrollable());
        }
    }

    #[test]
    fn payment_terminal_states_are_closed() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Refunded.is_terminal());
    }

    #[test]
    fn completed_derives_from_progress_threshold() {
        assert!(!derive_completed(0));
        assert!(!derive_completed(99));
        assert!(derive_completed(100));
        // Same input twice yields the same derivation.
        assert_eq!(derive_completed(50), derive_completed(50));
    }

    #[test]
    fn sort_order_appends_dense_and_zero_based() {
        assert_eq!(next_sort_order(None), 0);
        assert_eq!(next_sort_order(Some(0)), 1);
        assert_eq!(next_sort_order(Some(4)), 5);
    }

    #[test]
    fn owner_and_admin_manage_course_others_do_not() {
        let owner = user_with(UserRole::Instructor);
        let course = course_with(CourseStatus::Draft, owner.id);

        assert!(owner.can_manage_course(&course));
        assert!(user_with(UserRole::Admin).can_manage_course(&course));
        assert!(!user_with(UserRole::Instructor).can_manage_course(&course));
        assert!(!user_with(UserRole::Student).can_manage_course(&course));
    }

    #[test]
    fn enrollment_visibility_follows_course_management() {
        let owner = user_with(UserRole::Instructor);
        let course = course_with(CourseStatus::Published, owner.id);

        assert!(owner.can_view_course_enrollments(&course));
        assert!(user_with(UserRole::Admin).can_view_course_enrollments(&course));
        assert!(!user_with(UserRole::Student).can_view_course_enrollments(&course));
    }

    #[test]
    fn course_creation_limited_to_instructors_and_admins() {
        assert!(user_with(UserRole::Instructor).can_create_course());
        assert!(user_with(UserRole::Admin).can_create_course());
        assert!(!user_with(UserRole::Student).can_create_course());
    }

    #[test]
    fn capacity_check_treats_missing_capacity_as_unbounded() {
        let owner = Uuid::new_v4();
        let mut course = course_with(CourseStatus::Published, owner);
        assert!(course.has_capacity());

        course.capacity = Some(2);
        course.enrollment_count = 1;
        assert!(course.has_capacity());

        course.enrollment_count = 2;
        assert!(!course.has_capacity());
    }

    #[test]
    fn otp_expiry_and_cooldown_windows() {
        let now = Utc::now();
        let otp = Otp {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            code: "123456".to_string(),
            expires_at: now + chrono::Duration::minutes(5),
            created_at: now,
        };

        assert!(!otp.is_expired(now));
        assert!(otp.is_expired(now + chrono::Duration::minutes(6)));
        assert!(otp.in_resend_cooldown(now + chrono::Duration::seconds(30), 60));
        assert!(!otp.in_resend_cooldown(now + chrono::Duration::seconds(61), 60));
    }
}
