// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) → Protected (JWT auth) → Elevated (superadmin JWT auth)
//
// Every tier runs behind the tenant resolver, so handlers can read the
// `TenantContext` extension regardless of authentication.
pub mod public;    // Tier 1: No authentication required (/, /health, /api/tenant*)
pub mod protected; // Tier 2: JWT authentication required (/api/auth/*, /api/users)
pub mod elevated;  // Tier 3: Superadmin JWT required (/api/tenants)

pub mod utils;
