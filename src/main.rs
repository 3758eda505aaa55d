fn main() {
    playoff_pool_lib::run()
}
