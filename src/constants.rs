/// Default chroot under which fair locks queue their tickets.
pub const LOCKS_ROOT: &str = "/locks";

/// Default chroot for configuration channels.
pub const CONFIGS_ROOT: &str = "/configs";

/// Zero-padded width of service-assigned sequence suffixes. Padding keeps
/// lexicographic child order equal to numeric creation order.
pub(crate) const SEQUENCE_WIDTH: usize = 10;
