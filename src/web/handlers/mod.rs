pub mod websocket_handler;
