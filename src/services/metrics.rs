use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref INVITATIONS_ISSUED: CounterVec = register_counter_vec!(
        "api_invitations_issued_total",
        "Invitations issued by kind and delivery method",
        &["kind", "method"]
    ).unwrap();

    pub static ref INVITATIONS_ACCEPTED: CounterVec = register_counter_vec!(
        "api_invitations_accepted_total",
        "Invitations accepted by kind",
        &["kind"]
    ).unwrap();

    pub static ref SCHOOL_CODES_GENERATED: CounterVec = register_counter_vec!(
        "api_school_codes_generated_total",
        "School codes generated, by trigger",
        &["trigger"]
    ).unwrap();

    pub static ref STUDENTS_APPROVED: CounterVec = register_counter_vec!(
        "api_students_approved_total",
        "Pending students moved to active",
        &["via"]
    ).unwrap();

    pub static ref RATE_LIMIT_REJECTIONS: CounterVec = register_counter_vec!(
        "api_rate_limit_rejections_total",
        "Requests refused by a rate limit",
        &["limit"]
    ).unwrap();
}
