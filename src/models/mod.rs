pub mod arima;
pub mod lstm;
