// handlers/elevated/mod.rs - Tier 3: superadmin JWT required
pub mod tenant;

pub use tenant::create_tenant;
