/// Application name
pub const APP_NAME: &str = "Gateway Console";

/// Default number of rows per page in every listing view
pub const ITEMS_PER_PAGE: usize = 10;

/// Page sizes offered by the pagination controls
pub const PAGE_SIZE_OPTIONS: [usize; 4] = [10, 20, 50, 100];

/// Largest page size the gateway accepts
pub const MAX_PAGE_SIZE: usize = 100;

/// Default HTTP request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default gateway address for local development
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Default `Accept-Language` sent with every request
pub const DEFAULT_LANGUAGE: &str = "en";

/// Global settings keys (per-view keys are prefixed with the collection name)
pub const SETTING_PAGE_SIZE: &str = "page-size";
pub const SETTING_ID_SORT: &str = "id-sort";

/// Suffix appended to the name of a copied channel
pub const COPY_SUFFIX: &str = "_copy";

/// Channel priority floor accepted by the gateway
pub const MIN_CHANNEL_PRIORITY: i64 = -999;

/// Redemption batch limits
pub const REDEMPTION_NAME_MAX_CHARS: usize = 20;
pub const REDEMPTION_MAX_BATCH: usize = 100;

/// Account form limits
pub const USERNAME_MAX_CHARS: usize = 12;
pub const PASSWORD_MIN_CHARS: usize = 8;
pub const PASSWORD_MAX_CHARS: usize = 20;
