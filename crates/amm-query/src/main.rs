fn main() {
    amm_query::start(std::env::args());
}
