fn main() {
    bracket_board_lib::run()
}
