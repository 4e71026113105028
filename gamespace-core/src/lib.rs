//! GameSpace Core - Entity Types
//!
//! Data structures, the gateway error taxonomy, and the HTTP transport
//! contract. All other crates depend on this. No I/O lives here.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod transport;

pub use entities::{
    CatalogQuery, Game, LibraryEntry, LibraryStatusUpdate, LoginRequest, LoginResponse,
    NewLibraryEntry, NewReview, Rating, RatingOutOfRange, RefreshRequest, RefreshResponse,
    RegisterRequest, Review, UserSummary, DEFAULT_ROLE,
};
pub use enums::{CatalogOrdering, LibraryStatus, ParseEnumError};
pub use error::{AuthError, ErrorKind, FieldError, GatewayError, GatewayResult};
pub use identity::{GameId, LibraryEntryId, ReviewId, Timestamp, UserId};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};
