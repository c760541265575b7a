pub mod test_fixture;
