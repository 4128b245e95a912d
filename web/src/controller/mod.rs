pub(crate) mod client_data_controller;
pub(crate) mod health_check_controller;
pub(crate) mod notify_controller;
