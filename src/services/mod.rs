pub mod cart;
pub mod checkout;
pub mod emi;
pub mod gateway;
pub mod ids;
pub mod ledger;
pub mod notification;
pub mod payments;
