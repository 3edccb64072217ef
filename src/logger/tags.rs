/// Log tags for categorizing log messages by subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    System,
    Config,
    Database,
    Webserver,
    Websocket,
    Alerts,
    Hydrants,
    Weather,
    Logs,
    Auth,
    Notify,
}

impl LogTag {
    /// Fixed-width label used in the console prefix
    pub fn label(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Database => "DATABASE",
            LogTag::Webserver => "WEB",
            LogTag::Websocket => "WS",
            LogTag::Alerts => "ALERTS",
            LogTag::Hydrants => "HYDRANTS",
            LogTag::Weather => "WEATHER",
            LogTag::Logs => "LOGS",
            LogTag::Auth => "AUTH",
            LogTag::Notify => "NOTIFY",
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
