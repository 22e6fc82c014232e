pub mod booking;
pub mod cart;
pub mod payment;
pub mod product;
pub mod user;

pub use booking::{Booking, BookingStatus, PaymentStatus, TravelerDetail};
pub use cart::{Cart, CartItem};
pub use payment::{GatewayCallback, PaymentInitiation, PaymentOutcome, PaymentRequest};
pub use product::Product;
pub use user::{Role, User};
