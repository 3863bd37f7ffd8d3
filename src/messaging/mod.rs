// Module messaging - CommandBlock protocol and lock-free channels

pub mod channels;
pub mod command;
pub mod controls;
pub mod notification;
pub mod text_msg;
