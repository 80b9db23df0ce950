pub mod agents;
pub mod doctor;
pub mod onboard;
pub mod plan;
