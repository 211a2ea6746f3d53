pub mod mock_station;
