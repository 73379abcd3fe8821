pub mod command_handlers;
pub mod query_handlers;

pub use command_handlers::{
    CreateConfigurationHandler, RemoveSettingHandler, SetSettingHandler, SetThemeHandler,
    SwitchProfileHandler,
};
pub use query_handlers::{
    GetConfigurationByProfileHandler, GetConfigurationHandler, GetEventStoreStatsHandler,
    ListConfigurationsHandler,
};
