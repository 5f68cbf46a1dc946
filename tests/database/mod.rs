mod db_tests;
mod test_helpers;
