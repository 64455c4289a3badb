pub mod enumerate;
pub mod forward;
pub mod particle_filter;
