//! RPC type id registry for a data-session's multiplexed `rpc` sub-stream.

/// Filesystem operations (1001-1010).
pub mod fs {
    /// `fs/list`.
    pub const LIST: u32 = 1001;
    /// `fs/read`.
    pub const READ: u32 = 1002;
    /// `fs/write`.
    pub const WRITE: u32 = 1003;
    /// `fs/delete`.
    pub const DELETE: u32 = 1004;
    /// `fs/get_home`.
    pub const GET_HOME: u32 = 1005;
}

/// Terminal operations and notifications (2001-2012).
pub mod terminal {
    /// `terminal/create`.
    pub const CREATE: u32 = 2001;
    /// `terminal/list`.
    pub const LIST: u32 = 2002;
    /// `terminal/attach`.
    pub const ATTACH: u32 = 2003;
    /// `terminal/delete`.
    pub const DELETE: u32 = 2004;
    /// `terminal/history`.
    pub const HISTORY: u32 = 2005;
    /// `terminal/clear`.
    pub const CLEAR: u32 = 2006;
    /// `terminal/stats`.
    pub const STATS: u32 = 2007;
    /// `terminal/output`, a notify pushed by the attach forwarder.
    pub const OUTPUT: u32 = 2008;
    /// `terminal/input`, a client-to-agent notify.
    pub const INPUT: u32 = 2009;
    /// `terminal/resize`, a client-to-agent notify.
    pub const RESIZE: u32 = 2010;
    /// `terminal/name_update`, a notify pushed by the attach forwarder.
    pub const NAME_UPDATE: u32 = 2011;
    /// `terminal/sessions_changed`, a notify pushed by the registry forwarder.
    pub const SESSIONS_CHANGED: u32 = 2012;
}

/// Monitor operations (3001).
pub mod monitor {
    /// `monitor`.
    pub const MONITOR: u32 = 3001;
}

/// Agent/host info (4001).
pub mod sys {
    /// `sys/info`.
    pub const INFO: u32 = 4001;
}

/// Cross-session visibility (5001).
pub mod sessions {
    /// `sessions/list_active`.
    pub const LIST_ACTIVE: u32 = 5001;
}
