//! Backend endpoint paths.

pub const LOGIN: &str = "/api/auth/login";
pub const REGISTER: &str = "/api/auth/register";
pub const REFRESH: &str = "/api/auth/refresh";
pub const CURRENT_USER: &str = "/api/auth/users/me";

pub const TEACHERS: &str = "/api/teachers";
pub const BOOKINGS: &str = "/api/bookings";
pub const STUDENT_BOOKINGS: &str = "/api/students/my-bookings";

/// Availability windows of one teacher (list and create).
pub fn teacher_availability(teacher_id: i64) -> String {
    format!("{TEACHERS}/{teacher_id}/availability")
}

/// A single availability window (update and delete).
pub fn availability(availability_id: i64) -> String {
    format!("{TEACHERS}/availability/{availability_id}")
}

pub fn booking(booking_id: i64) -> String {
    format!("{BOOKINGS}/{booking_id}")
}

pub fn confirm_booking(booking_id: i64) -> String {
    format!("{BOOKINGS}/{booking_id}/confirm")
}
