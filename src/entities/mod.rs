pub mod asset;
pub mod part;
pub mod part_asset_link;
pub mod sequence_counter;
pub mod stock_transaction;
pub mod stock_transaction_item;
