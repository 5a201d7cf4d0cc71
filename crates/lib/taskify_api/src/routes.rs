//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_REGISTER: &str = "/api/v1/auth/register";
pub const POST_AUTH_LOGIN: &str = "/api/v1/auth/login";
pub const POST_AUTH_REFRESH: &str = "/api/v1/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/api/v1/auth/logout";

pub const TASKS: &str = "/api/v1/tasks";
pub const TASKS_ID: &str = "/api/v1/tasks/{id}";

pub const USERS: &str = "/api/v1/users";
pub const USERS_ID: &str = "/api/v1/users/{user_id}";
pub const USERS_PROFILE: &str = "/api/v1/users/profile";
pub const USERS_PROFILE_ID: &str = "/api/v1/users/profile/{user_id}";
pub const USERS_ID_TASKS: &str = "/api/v1/users/{user_id}/tasks";
