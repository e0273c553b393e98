pub mod dashboards;
pub mod normalize;
pub mod profiles;
pub mod scraping;
pub mod users;

mod db;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use dashboards::{ActivityTrigger, Dashboard, DashboardStore, DashboardUpdate, Ledger};
pub use profiles::{NewProfile, Profile, ProfileService, ProfileStore, ProfileUpdate};
pub use users::{NewUser, User, UserStore};
