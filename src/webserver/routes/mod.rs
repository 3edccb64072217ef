pub mod alerts;
pub mod hydrants;
pub mod logs;
pub mod weather;
pub mod websocket;
