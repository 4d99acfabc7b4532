use crate::models::{
    ActivityLog, ApplicationStatus, Course, CourseModule, Enrollment, InstructorApplication,
    Lesson, LessonStatus, LessonType, Payment, PaymentStatus, User,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// DTOs define the structure of data exchanged with clients. They are kept
// separate from database models to control exactly what gets exposed.

// ============================================================================
// Authentication DTOs
// ============================================================================

/// Registration request. Registration is OTP-gated: the response carries no
/// token, only a pending-verification acknowledgement.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(
        length(min = 1, message = "Confirm Password is required"),
        must_match(other = "password", message = "passwords do not match")
    )]
    #[serde(rename = "confirmPassword")]
    pub password_confirm: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct VerifyOtpDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ResendOtpDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Login / OTP-verification success response with the session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponseDto {
    pub status: String,
    pub token: String,
    pub user: FilterUserDto,
}

/// Generic success response
#[derive(Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

// ============================================================================
// Pagination & Query DTOs
// ============================================================================

#[derive(Serialize, Deserialize, Validate, Debug)]
pub struct RequestQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<i32>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i32>,
}

/// Pagination metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationDto {
    pub page: i32,
    pub limit: i32,
    pub total: i32,
    #[serde(rename = "totalPages")]
    pub total_pages: i32,
}

// ============================================================================
// User Response DTOs (filtered data for client)
// ============================================================================

/// Client-safe user projection (excludes the password hash).
#[derive(Debug, Serialize, Deserialize)]
pub struct FilterUserDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id.to_string(),
            name: user.name.to_owned(),
            email: user.email.to_owned(),
            role: user.role.to_str().to_string(),
            status: user.status.to_str().to_string(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }

    pub fn filter_users(users: &[User]) -> Vec<FilterUserDto> {
        users.iter().map(FilterUserDto::filter_user).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserData {
    pub user: FilterUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponseDto {
    pub status: String,
    pub data: UserData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponseDto {
    pub status: String,
    pub users: Vec<FilterUserDto>,
    pub results: i64,
}

// ============================================================================
// Instructor application DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ApplyInstructorDto {
    #[validate(length(min = 1, message = "Motivation is required"))]
    pub motivation: String,
}

/// Admin review decision. Rejections must carry a reason.
#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct ReviewApplicationDto {
    pub status: ApplicationStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationResponseDto {
    pub status: String,
    pub data: InstructorApplication,
}

#[derive(Debug, Serialize)]
pub struct ApplicationListResponseDto {
    pub status: String,
    pub data: Vec<InstructorApplication>,
}

// ============================================================================
// Course DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateCourseDto {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[validate(range(min = 0.0, message = "Price must not be negative"))]
    pub price: f64,

    pub category: Option<String>,
    pub level: Option<String>,
    #[serde(rename = "thumbnailUrl")]
    pub thumbnail_url: Option<String>,

    #[validate(range(min = 1, message = "Capacity must be positive"))]
    pub capacity: Option<i32>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateCourseDto {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: Option<String>,

    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: Option<String>,

    #[validate(range(min = 0.0, message = "Price must not be negative"))]
    pub price: Option<f64>,

    pub category: Option<String>,
    pub level: Option<String>,
    #[serde(rename = "thumbnailUrl")]
    pub thumbnail_url: Option<String>,

    #[validate(range(min = 1, message = "Capacity must be positive"))]
    pub capacity: Option<i32>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RejectCourseDto {
    #[validate(length(min = 1, message = "Rejection reason is required"))]
    pub reason: String,
}

/// Published-catalog listing entry with the aggregated rating attached.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct CourseListItemDto {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub category: Option<String>,
    pub level: Option<String>,
    #[serde(rename = "thumbnailUrl")]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "instructorName")]
    pub instructor_name: String,
    #[serde(rename = "enrollmentCount")]
    pub enrollment_count: i32,
    #[serde(rename = "averageRating")]
    pub average_rating: Option<f64>,
    #[serde(rename = "reviewCount")]
    pub review_count: i64,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CourseListResponseDto {
    pub status: String,
    pub data: Vec<CourseListItemDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct CourseResponseDto {
    pub status: String,
    pub data: Course,
}

/// Instructor dashboard listing: the caller's own courses, all statuses.
#[derive(Debug, Serialize)]
pub struct InstructorCourseListResponseDto {
    pub status: String,
    pub data: Vec<Course>,
}

/// Query parameters for the public catalog.
#[derive(Debug, Deserialize, Validate)]
pub struct CoursesQueryParams {
    #[validate(range(min = 1))]
    pub page: Option<i32>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i32>,

    pub category: Option<String>,
    pub level: Option<String>,

    #[validate(range(min = 0.0))]
    #[serde(rename = "minPrice")]
    pub min_price: Option<f64>,

    #[validate(range(min = 0.0))]
    #[serde(rename = "maxPrice")]
    pub max_price: Option<f64>,

    #[validate(length(min = 1))]
    pub search: Option<String>,
}

// ============================================================================
// Module / Lesson DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateModuleDto {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,

    /// Auto-assigned as max(existing) + 1 when omitted.
    #[validate(range(min = 0))]
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<i32>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateModuleDto {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: Option<String>,

    #[validate(range(min = 0))]
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<i32>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct CreateLessonDto {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,

    pub content: Option<String>,

    #[serde(rename = "lessonType")]
    pub lesson_type: LessonType,

    #[validate(range(min = 0))]
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<i32>,

    #[validate(range(min = 1))]
    #[serde(rename = "durationMinutes")]
    pub duration_minutes: Option<i32>,

    #[serde(rename = "videoUrl")]
    pub video_url: Option<String>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateLessonDto {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: Option<String>,

    pub content: Option<String>,

    #[serde(rename = "lessonType")]
    pub lesson_type: Option<LessonType>,

    pub status: Option<LessonStatus>,

    #[validate(range(min = 0))]
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<i32>,

    #[validate(range(min = 1))]
    #[serde(rename = "durationMinutes")]
    pub duration_minutes: Option<i32>,

    #[serde(rename = "videoUrl")]
    pub video_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModuleResponseDto {
    pub status: String,
    pub data: CourseModule,
}

#[derive(Debug, Serialize)]
pub struct ModuleListResponseDto {
    pub status: String,
    pub data: Vec<CourseModule>,
}

#[derive(Debug, Serialize)]
pub struct LessonResponseDto {
    pub status: String,
    pub data: Lesson,
}

#[derive(Debug, Serialize)]
pub struct LessonListResponseDto {
    pub status: String,
    pub data: Vec<Lesson>,
}

// ============================================================================
// Enrollment DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EnrollDto {
    #[serde(rename = "courseId")]
    pub course_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateProgressDto {
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: i32,
}

/// Caller's enrollment joined with its course for list views.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct MyEnrollmentDto {
    pub id: Uuid,
    #[serde(rename = "courseId")]
    pub course_id: Uuid,
    #[serde(rename = "courseTitle")]
    pub course_title: String,
    pub status: crate::models::EnrollmentStatus,
    pub progress: i32,
    pub completed: bool,
    #[serde(rename = "enrolledAt")]
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentResponseDto {
    pub status: String,
    pub data: Enrollment,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentListResponseDto {
    pub status: String,
    pub data: Vec<Enrollment>,
}

#[derive(Debug, Serialize)]
pub struct MyEnrollmentListResponseDto {
    pub status: String,
    pub data: Vec<MyEnrollmentDto>,
}

// ============================================================================
// Payment DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InitiatePaymentDto {
    #[serde(rename = "courseId")]
    pub course_id: Uuid,

    #[validate(range(min = 0.0, message = "Amount must not be negative"))]
    pub amount: f64,
}

/// Simulated-gateway handle returned from initiation. The client "completes"
/// the payment by calling the process endpoint with this payment id.
#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponseDto {
    pub status: String,
    #[serde(rename = "paymentId")]
    pub payment_id: Uuid,
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    #[serde(rename = "processingUrl")]
    pub processing_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProcessPaymentDto {
    pub status: PaymentStatus,

    #[serde(rename = "externalTransactionId")]
    pub external_transaction_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponseDto {
    pub status: String,
    pub data: Payment,
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponseDto {
    pub status: String,
    pub data: Vec<Payment>,
}

/// Revenue aggregate over COMPLETED payments for the caller's own courses.
#[derive(Debug, Serialize)]
pub struct PaymentStatsDto {
    pub status: String,
    #[serde(rename = "totalRevenue")]
    pub total_revenue: Decimal,
    #[serde(rename = "monthlyRevenue")]
    pub monthly_revenue: Decimal,
    #[serde(rename = "completedCount")]
    pub completed_count: i64,
}

// ============================================================================
// Review DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InputReviewDto {
    #[serde(rename = "courseId")]
    pub course_id: Uuid,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReviewDto {
    pub id: Uuid,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "courseId")]
    pub course_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReviewListResponseDto {
    pub status: String,
    pub data: Vec<ReviewDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct SingleReviewResponseDto {
    pub status: String,
    pub data: ReviewDto,
}

/// Full-aggregate rating stats: one bucket per star plus the true average.
#[derive(Debug, Serialize)]
pub struct RatingStatsDto {
    pub status: String,
    pub average: Option<f64>,
    pub count: i64,
    pub buckets: [i64; 5],
}

// ============================================================================
// Activity log DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ActivityListResponseDto {
    pub status: String,
    pub data: Vec<ActivityLog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_dto_rejects_mismatched_passwords() {
        let dto = RegisterUserDto {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "secret1".to_string(),
            password_confirm: "secret2".to_string(),
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn review_dto_enforces_rating_bounds() {
        let mut dto = InputReviewDto {
            course_id: Uuid::new_v4(),
            rating: 0,
            comment: None,
        };
        assert!(dto.validate().is_err());
        dto.rating = 6;
        assert!(dto.validate().is_err());
        dto.rating = 5;
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn progress_dto_enforces_percentage_bounds() {
        assert!(UpdateProgressDto { progress: -1 }.validate().is_err());
        assert!(UpdateProgressDto { progress: 101 }.validate().is_err());
        assert!(UpdateProgressDto { progress: 0 }.validate().is_ok());
        assert!(UpdateProgressDto { progress: 100 }.validate().is_ok());
    }

    #[test]
    fn course_dto_rejects_negative_price() {
        let dto = CreateCourseDto {
            title: "T".to_string(),
            description: "D".to_string(),
            price: -1.0,
            ..Default::default()
        };
        assert!(dto.validate().is_err());
    }
}
