pub mod money;
pub mod payer;
pub mod pii;
pub mod validation;

pub use money::{format_usd, parse_amount, AmountError, MAX_AMOUNT_CENTS};
pub use payer::{Payer, UnknownPayer};
pub use pii::Masked;
pub use validation::FieldErrors;
