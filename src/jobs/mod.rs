pub mod auto_confirm;
