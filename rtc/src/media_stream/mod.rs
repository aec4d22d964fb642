pub mod track_local;
