mod session_token;

pub use session_token::SessionToken;
