use std::sync::Arc;

use plateful_service::Service;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<Service>,
}
impl AppState {
	pub fn new(config: plateful_config::Config) -> color_eyre::Result<Self> {
		let service = Service::new(config)?;

		Ok(Self { service: Arc::new(service) })
	}

	pub fn with_service(service: Arc<Service>) -> Self {
		Self { service }
	}
}
