pub mod delivery_monitor;
