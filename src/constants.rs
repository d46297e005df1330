// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3030;

// Portal routes
pub const LANDING_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const SIGNUP_PATH: &str = "/signup";
pub const PARENT_HOME_PATH: &str = "/parent";
pub const ADMIN_HOME_PATH: &str = "/admin";

// Where identity ceremonies return the user agent
pub const CALLBACK_PATH: &str = "/auth/callback";

// Local fallback backend
pub const DEFAULT_MOCK_STORE_PATH: &str = ".village/mock_user.json";
pub const DEFAULT_MOCK_SIGN_IN_DELAY_MS: u64 = 800;
pub const MOCK_USER_ID: &str = "mock-user-123";
pub const MOCK_USER_EMAIL: &str = "parent@example.com";
pub const MOCK_USER_NAME: &str = "Thompson Family";
pub const MOCK_USER_AVATAR: &str = "https://picsum.photos/200";

// Hosted backend
pub const DEFAULT_SESSION_POLL_SECS: u64 = 60;
pub const ACCESS_TOKEN_AUDIENCE: &str = "authenticated";

// Capacity of the identity backend's change channel
pub const SESSION_CHANGE_CAPACITY: usize = 64;

// Upper bound on redirects followed for a single navigation
pub const MAX_REDIRECT_HOPS: usize = 4;
