mod support;

mod server;
