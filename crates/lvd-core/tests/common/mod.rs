pub mod platform_server;
