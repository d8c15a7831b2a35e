pub mod csv_coordinate_store;
