use sqlx::{Pool, Postgres};

pub mod scheduler;

mod user;
pub use user::UserExt;

mod course;
pub use course::{CourseExt, CourseFilters};

mod content;
pub use content::ContentExt;

mod enrollment;
pub use enrollment::EnrollmentExt;

mod payment;
pub use payment::PaymentExt;

mod review;
pub use review::{ReviewExt, fold_rating_stats};

mod activity;
pub use activity::{ActivityEvent, ActivityExt};

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}
impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}
